//! Session state carried across REPL/pipe-mode lines.

/// The database a line implicitly targets when it doesn't override
/// `--db`.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub current_db: String,
}

impl SessionState {
    pub fn new(default_db: impl Into<String>) -> Self {
        Self { current_db: default_db.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_given_db() {
        let state = SessionState::new("_default");
        assert_eq!(state.current_db, "_default");
    }
}
