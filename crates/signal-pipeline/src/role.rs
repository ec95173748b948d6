use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Scanner,
    Analyst,
    Executor,
    RiskManager,
    Strategist,
    Monitor,
    FnoStrategist,
}

impl Role {
    /// LLM validation prompt template for this role, kept in a small
    /// static table rather than inlined at each call site.
    pub fn prompt_for(&self) -> &'static str {
        match self {
            Role::Scanner => {
                "You scan broad watchlists for setups. Approve this signal given the indicator \
                 snapshot, yes/no, with a one-line reason."
            }
            Role::Analyst => {
                "You validate signals against technical confluence. Approve this signal given \
                 the indicator snapshot, yes/no, with a one-line reason."
            }
            Role::Executor => {
                "You execute pre-validated signals. No validation prompt is used for this role."
            }
            Role::RiskManager => {
                "You weigh portfolio-level risk before approving new exposure. Approve this \
                 signal given the indicator snapshot, yes/no, with a one-line reason."
            }
            Role::Strategist => {
                "You favour multi-timeframe confirmation. Approve this signal given the \
                 indicator snapshot, yes/no, with a one-line reason."
            }
            Role::Monitor => {
                "You watch existing exposure for deterioration. Approve this signal given the \
                 indicator snapshot, yes/no, with a one-line reason."
            }
            Role::FnoStrategist => {
                "You trade futures and options with options-flow context. Approve this signal \
                 given the indicator snapshot and options chain, yes/no, with a one-line reason."
            }
        }
    }

    /// 0.65 for every role; expressed as a method so a future role can
    /// diverge without touching pipeline code.
    pub fn auto_execute_threshold(&self) -> f64 {
        0.65
    }

    /// Only EXECUTOR and SCANNER bots auto-execute; every other role's
    /// qualifying signals are always left PENDING for user approval.
    pub fn auto_executes(&self) -> bool {
        matches!(self, Role::Executor | Role::Scanner)
    }

    pub fn skip_llm_validation(&self) -> bool {
        matches!(self, Role::Executor)
    }

    pub fn is_fno(&self) -> bool {
        matches!(self, Role::FnoStrategist)
    }

    /// Aggressiveness tag passed to the native engine's `scan` command.
    pub fn aggressiveness(&self, autonomous_agent: bool) -> indicator_engine::Aggressiveness {
        if matches!(self, Role::Executor) || autonomous_agent {
            indicator_engine::Aggressiveness::High
        } else {
            indicator_engine::Aggressiveness::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_executor_and_scanner_auto_execute() {
        assert!(Role::Executor.auto_executes());
        assert!(Role::Scanner.auto_executes());
        assert!(!Role::Analyst.auto_executes());
        assert!(!Role::RiskManager.auto_executes());
        assert!(!Role::Strategist.auto_executes());
        assert!(!Role::Monitor.auto_executes());
        assert!(!Role::FnoStrategist.auto_executes());
    }

    #[test]
    fn only_executor_skips_llm_validation() {
        assert!(Role::Executor.skip_llm_validation());
        for role in [
            Role::Scanner,
            Role::Analyst,
            Role::RiskManager,
            Role::Strategist,
            Role::Monitor,
            Role::FnoStrategist,
        ] {
            assert!(!role.skip_llm_validation());
        }
    }
}
