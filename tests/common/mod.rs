//! Fixture layout shared by the integration tests
//!
//! ```text
//! <tmp>/config/lora-03/{config.json,multidatabackend.json,user_prompt_library.json}
//! <tmp>/config/templates/{lora,lokr}/...
//! <tmp>/datasets/{lulu-15,beach}
//! ```

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tuneconf::io::paths::Roots;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const CONFIG_JSON: &str = r#"{
  "--output_dir": "output/lora/03",
  "--tracker_run_name": "lora-03",
  "--validation_prompt": "a photo of lora",
  "--learning_rate": 0.0001
}
"#;

pub const BACKEND_JSON: &str = r#"[
  {
    "id": "1024",
    "type": "local",
    "instance_data_dir": "datasets/old-set",
    "cache_dir_vae": "cache/vae/lora-old-set/1024",
    "resolution": 1024
  },
  {
    "id": "768",
    "type": "local",
    "instance_data_dir": "datasets/old-set",
    "cache_dir_vae": "cache/vae/lora-old-set/768",
    "resolution": 768
  },
  {
    "id": "text_embeds",
    "type": "local",
    "dataset_type": "text_embeds",
    "default": true,
    "cache_dir": "cache/text/lora-old-set",
    "instance_data_dir": "datasets/old-set",
    "cache_dir_vae": "cache/vae/lora-old-set/text"
  }
]
"#;

pub const PROMPTS_JSON: &str = r#"{
  "portrait_lora": "a portrait of lora",
  "landscape": "a landscape"
}
"#;

pub const TEMPLATE_CONFIG_JSON: &str = r#"{
  "--output_dir": "output/__TOKEN_NAME__/__VERSION_NUMBER__",
  "--tracker_run_name": "__TOKEN_NAME_VERSION__",
  "--validation_prompt": "a photo of __TOKEN_NAME__"
}
"#;

pub const TEMPLATE_BACKEND_JSON: &str = r#"[
  {
    "id": "1024",
    "type": "local",
    "instance_data_dir": "datasets/__DATASET__",
    "cache_dir_vae": "cache/vae/__TOKEN_NAME__/1024"
  },
  {
    "id": "text_embeds",
    "type": "local",
    "dataset_type": "text_embeds",
    "cache_dir": "cache/text/__TOKEN_NAME__"
  }
]
"#;

pub const TEMPLATE_PROMPTS_JSON: &str = r#"{
  "__TOKEN_NAME__ portrait": "a portrait of __TOKEN_NAME__",
  "closeup": "a closeup of _TOKEN_NAME_"
}
"#;

pub struct Workspace {
    pub dir: TempDir,
    pub roots: Roots,
}

impl Workspace {
    pub fn config_root(&self) -> &Path {
        &self.roots.config_root
    }

    pub fn folder(&self, name: &str) -> PathBuf {
        self.roots.config_root.join(name)
    }

    pub fn read_json(&self, folder: &str, file: &str) -> serde_json::Value {
        let text = fs::read_to_string(self.folder(folder).join(file)).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// Build the standard fixture tree
pub fn workspace() -> Result<Workspace> {
    let dir = TempDir::new()?;
    let roots = Roots::new(dir.path().join("config"));

    let source = roots.config_root.join("lora-03");
    fs::create_dir_all(&source)?;
    fs::write(source.join("config.json"), CONFIG_JSON)?;
    fs::write(source.join("multidatabackend.json"), BACKEND_JSON)?;
    fs::write(source.join("user_prompt_library.json"), PROMPTS_JSON)?;
    fs::create_dir_all(source.join(".ipynb_checkpoints"))?;
    fs::write(source.join(".ipynb_checkpoints/config-checkpoint.json"), "{}")?;

    for kind in ["lora", "lokr"] {
        let template = roots.templates_root.join(kind);
        fs::create_dir_all(&template)?;
        fs::write(template.join("config.json"), TEMPLATE_CONFIG_JSON)?;
        fs::write(template.join("multidatabackend.json"), TEMPLATE_BACKEND_JSON)?;
        fs::write(template.join("user_prompt_library.json"), TEMPLATE_PROMPTS_JSON)?;
    }

    for dataset in ["lulu-15", "beach"] {
        fs::create_dir_all(roots.datasets_root.join(dataset))?;
    }

    Ok(Workspace { dir, roots })
}
