use super::{CommandHandler, CommandResult};
use crate::catalog::CatalogReader;
use crate::cli::app::CatalogKind;
use crate::config::Settings;
use crate::Result;

/// Handler for the `list` command
pub struct ListCommand {
    pub settings: Settings,
    pub catalog: CatalogKind,
    pub json: bool,
}

impl CommandHandler for ListCommand {
    fn execute(&self) -> Result<CommandResult> {
        let entries = self.entries()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(CommandResult::Success(None));
        }

        if entries.is_empty() {
            println!("No {} found.", self.label());
            return Ok(CommandResult::Success(None));
        }

        print!("{}", format_listing(&entries));
        Ok(CommandResult::Success(None))
    }

    fn name(&self) -> &'static str {
        "list"
    }
}

impl ListCommand {
    pub fn new(settings: Settings, catalog: CatalogKind, json: bool) -> Self {
        Self {
            settings,
            catalog,
            json,
        }
    }

    fn entries(&self) -> Result<Vec<String>> {
        let reader = CatalogReader::new(self.settings.roots());
        match self.catalog {
            CatalogKind::Folders => reader.source_folders(),
            CatalogKind::Datasets => reader.datasets(),
            CatalogKind::Templates => reader.templates(),
        }
    }

    fn label(&self) -> &'static str {
        match self.catalog {
            CatalogKind::Folders => "configuration folders",
            CatalogKind::Datasets => "datasets",
            CatalogKind::Templates => "templates",
        }
    }
}

/// Numbered listing; the numbers are the indices `--from` and `--dataset` accept
pub fn format_listing(entries: &[String]) -> String {
    let width = entries.len().to_string().len();
    entries
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{:>width$}) {}\n", i + 1, name, width = width))
        .collect()
}
