use crate::ExecutionContextOffsets;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Tunable parameters for entry trampoline generation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    /// Number of leading parameters of every entry signature that are
    /// already resident in registers when the trampoline is entered (the
    /// execution context and module context pointers). Argument marshaling
    /// skips them.
    pub reserved_params: usize,

    /// Where the saved frame pointer, stack pointer and return address live
    /// inside the host's execution context record.
    pub execution_context: ExecutionContextOffsets,

    /// Size in bytes of the scratch stack a host hands to each call.
    pub scratch_stack_size: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            reserved_params: 2,
            execution_context: ExecutionContextOffsets::default(),
            scratch_stack_size: 64 << 10,
        }
    }
}

/// Errors raised while loading [`Tunables`].
#[derive(Error, Debug)]
pub enum TunablesError {
    /// The configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field had a value that can never work.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Tunables {
    /// Parses tunables from TOML text; unspecified fields keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, TunablesError> {
        let tunables: Tunables = toml::from_str(text)?;
        tunables.validate()?;
        log::debug!("loaded tunables: {tunables:?}");
        Ok(tunables)
    }

    /// Checks the invariants the trampoline generator relies on.
    pub fn validate(&self) -> Result<(), TunablesError> {
        let ctx = &self.execution_context;
        for (name, offset) in ctx.fields() {
            if offset % 8 != 0 {
                return Err(TunablesError::Invalid(format!(
                    "execution_context.{name} offset {offset} is not 8-byte aligned"
                )));
            }
        }
        let mut offsets = ctx.fields().map(|(_, offset)| offset);
        offsets.sort_unstable();
        if offsets.windows(2).any(|w| w[0] == w[1]) {
            return Err(TunablesError::Invalid(
                "execution_context fields must not overlap".to_string(),
            ));
        }
        if self.scratch_stack_size % 16 != 0 {
            return Err(TunablesError::Invalid(format!(
                "scratch_stack_size {} is not 16-byte aligned",
                self.scratch_stack_size
            )));
        }
        Ok(())
    }
}
