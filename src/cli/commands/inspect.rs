use super::{CommandHandler, CommandResult};
use crate::config::Settings;
use crate::config_set::{ConfigSet, DocumentKind};
use crate::naming::{self, DatasetRef, Identifier};
use crate::{Result, TuneconfError};

/// Handler for the `inspect` command
pub struct InspectCommand {
    pub settings: Settings,
    pub folder: String,
    pub dataset: Option<String>,
}

impl CommandHandler for InspectCommand {
    fn execute(&self) -> Result<CommandResult> {
        let identifier = Identifier::parse(&self.folder)?;
        let dir = self.settings.roots().config_root.join(&self.folder);
        if !dir.is_dir() {
            return Err(TuneconfError::catalog_unavailable(&dir, "folder not found"));
        }

        let set = ConfigSet::load(&dir)?;
        println!("Folder:   {}", dir.display());
        println!("Token:    {}", identifier.token());
        println!("Version:  {}", identifier.version());

        println!("Documents:");
        for kind in DocumentKind::ALL {
            let status = if set.get(kind).is_some() {
                "present"
            } else if let Some(reason) = set.load_failures().get(&kind) {
                reason.as_str()
            } else {
                "absent"
            };
            println!("  {:<26} {}", kind.file_name(), status);
        }

        let referenced = match set.dataset_reference() {
            Ok(dataset) => dataset,
            Err(e) => {
                println!("⚠️  {}", e);
                None
            }
        };
        match &referenced {
            Some(dataset) => println!("Dataset:  {}", dataset),
            None => println!("Dataset:  (none referenced)"),
        }

        let dataset = self.dataset.clone().map(DatasetRef::new).or(referenced);
        let Some(dataset) = dataset else {
            return Ok(CommandResult::Warning(
                "No dataset to derive cache paths from; pass --dataset".to_string(),
            ));
        };

        let paths = naming::derive(&identifier, &dataset.name);
        println!("Cache paths for dataset '{}':", dataset);
        for id in &self.settings.resolution_ids {
            println!("  {:<12} {}", id, paths.vae_dir_for(id));
        }
        println!("  {:<12} {}", crate::rewrite::TEXT_EMBEDS_ID, paths.text_path);

        Ok(CommandResult::Success(None))
    }

    fn name(&self) -> &'static str {
        "inspect"
    }
}

impl InspectCommand {
    pub fn new(settings: Settings, folder: String, dataset: Option<String>) -> Self {
        Self {
            settings,
            folder,
            dataset,
        }
    }
}
