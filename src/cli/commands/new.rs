use super::{CommandHandler, CommandResult};
use crate::catalog::{Selection, TemplateKind};
use crate::config::Settings;
use crate::instantiate::{
    DatasetSpec, InstantiationPlan, InstantiationReport, InstantiationRequest, Instantiator,
    SourceOrigin, SourceSpec,
};
use crate::rewrite::StrategyChoice;
use crate::{Result, TuneconfError};
use std::io::{self, Write};

/// Handler for the `new` command
pub struct NewCommand {
    pub settings: Settings,
    pub from: Option<String>,
    pub template: Option<TemplateKind>,
    pub token: Option<String>,
    pub version: String,
    pub dataset: Option<String>,
    pub reuse_dataset: bool,
    pub strategy: Option<StrategyChoice>,
    pub yes: bool,
    pub json: bool,
}

impl CommandHandler for NewCommand {
    fn execute(&self) -> Result<CommandResult> {
        let request = self.request()?;
        let mut instantiator = Instantiator::from_settings(&self.settings, self.strategy)?;
        let plan = instantiator.plan(&request)?;

        if !self.yes {
            eprint!("{}", format_plan(&plan));
            if !confirm()? {
                return Ok(CommandResult::Warning("Cancelled, nothing was created".to_string()));
            }
        }

        let report = instantiator.execute(&plan)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", format_report(&report));
        }

        if report.documents_skipped.is_empty() {
            Ok(CommandResult::Success(None))
        } else {
            Ok(CommandResult::Warning(format!(
                "{} document(s) were left as copied",
                report.documents_skipped.len()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "new"
    }
}

impl NewCommand {
    /// Translate command line selections into a request
    pub fn request(&self) -> Result<InstantiationRequest> {
        let source = match (&self.from, self.template) {
            (Some(from), None) => SourceSpec::Existing {
                selection: Selection::parse(from),
                token: self.token.clone(),
            },
            (None, Some(kind)) => SourceSpec::Template {
                kind,
                token: self.token.clone().ok_or_else(|| {
                    TuneconfError::Cli("--template requires --token".to_string())
                })?,
            },
            _ => {
                return Err(TuneconfError::Cli(
                    "exactly one of --from or --template is required".to_string(),
                ))
            }
        };

        let dataset = match (&self.dataset, self.reuse_dataset) {
            (Some(dataset), false) => DatasetSpec::Select(Selection::parse(dataset)),
            (None, true) => DatasetSpec::Reuse,
            _ => {
                return Err(TuneconfError::Cli(
                    "exactly one of --dataset or --reuse-dataset is required".to_string(),
                ))
            }
        };

        Ok(InstantiationRequest {
            source,
            version: self.version.clone(),
            dataset,
        })
    }
}

fn confirm() -> Result<bool> {
    eprint!("Proceed? (y/N) ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn format_plan(plan: &InstantiationPlan) -> String {
    let source = match &plan.origin {
        SourceOrigin::Existing { identifier } => format!("folder {}", identifier),
        SourceOrigin::Template { template } => format!("template {}", template),
    };
    let dataset_note = if plan.dataset_reused { " (reused)" } else { "" };
    format!(
        "Source:      {} ({})\nNew folder:  {}\nDataset:     {}{}\nText cache:  {}\n",
        source,
        plan.source_path.display(),
        plan.destination_path.display(),
        plan.dataset,
        dataset_note,
        plan.cache_paths.text_path
    )
}

pub fn format_report(report: &InstantiationReport) -> String {
    let mut out = format!(
        "✅ Created {} ({} strategy, {} files copied)\n",
        report.destination_path.display(),
        report.strategy_used,
        report.files_copied
    );
    for name in &report.documents_rewritten {
        out.push_str(&format!("   rewritten  {}\n", name));
    }
    for (name, reason) in &report.documents_skipped {
        out.push_str(&format!("   ⚠️  skipped {}: {}\n", name, reason));
    }
    out
}
