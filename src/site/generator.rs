//! External site generator invoked as a child process.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use super::SiteGenerator;
use crate::error::GeneratorError;

/// Runs a generator program with no arguments and waits for it.
///
/// The program is expected to read the posts directory and refresh the
/// output directory. Its stdout and stderr pass through to ours.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl SiteGenerator for CommandGenerator {
    async fn generate(&self) -> Result<(), GeneratorError> {
        info!(program = %self.program, "Running site generator");

        let status = Command::new(&self.program)
            .status()
            .await
            .map_err(|source| GeneratorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(GeneratorError::Failed {
                program: self.program.clone(),
                status,
            });
        }

        info!(program = %self.program, "Site generator finished");
        Ok(())
    }
}
