#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committing,
    Committed,
    Aborted,
    RolledBack,
}

impl TxState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Committed | TxState::Aborted | TxState::RolledBack)
    }
}
