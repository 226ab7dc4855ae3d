use super::{CommandHandler, CommandResult};
use crate::config::Settings;
use crate::Result;
use std::path::PathBuf;

/// Handler for the `doctor` command
pub struct DoctorCommand {
    pub settings: Settings,
    pub settings_file: Option<PathBuf>,
}

impl CommandHandler for DoctorCommand {
    fn execute(&self) -> Result<CommandResult> {
        match &self.settings_file {
            Some(path) => println!("Settings: {}", path.display()),
            None => println!("Settings: built-in defaults"),
        }
        println!("Strategy: {:?}", self.settings.strategy);
        println!("Resolution ids: {}", self.settings.resolution_ids.join(", "));

        let roots = self.settings.roots();
        let missing = roots.missing();
        for (label, path) in [
            ("config", roots.config_root.as_path()),
            ("datasets", roots.datasets_root.as_path()),
            ("templates", roots.templates_root.as_path()),
        ] {
            let status = if missing.iter().any(|(l, _)| *l == label) {
                "❌ missing"
            } else {
                "✅"
            };
            println!("{:<10} {} {}", label, path.display(), status);
        }

        match roots.verify() {
            Ok(()) => Ok(CommandResult::Success(None)),
            Err(e) => Ok(CommandResult::Error(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "doctor"
    }
}

impl DoctorCommand {
    pub fn new(settings: Settings, settings_file: Option<PathBuf>) -> Self {
        Self {
            settings,
            settings_file,
        }
    }
}
