mod common;

use common::{init_test_logging, workspace, PROMPTS_JSON};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tuneconf::catalog::{Selection, TemplateKind};
use tuneconf::instantiate::{
    CopyFilter, DatasetSpec, InstantiationRequest, Instantiator, Phase, SourceSpec,
};
use tuneconf::rewrite::{RewriteEngine, StrategyChoice, StrategyKind};
use tuneconf::TuneconfError;

fn instantiator(roots: &tuneconf::io::paths::Roots, choice: StrategyChoice) -> Instantiator {
    Instantiator::new(roots.clone(), RewriteEngine::select(choice).unwrap())
        .with_copy_filter(CopyFilter::new(&[".ipynb_checkpoints", "*~"]).unwrap())
}

fn from_existing(name: &str, version: &str, dataset: &str) -> InstantiationRequest {
    InstantiationRequest {
        source: SourceSpec::Existing {
            selection: Selection::parse(name),
            token: None,
        },
        version: version.to_string(),
        dataset: DatasetSpec::Select(Selection::parse(dataset)),
    }
}

fn tree_snapshot(root: &Path) -> BTreeSet<String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap().path().display().to_string())
        .collect()
}

#[test]
fn test_new_version_of_existing_folder() {
    init_test_logging();
    let ws = workspace().unwrap();
    let mut inst = instantiator(&ws.roots, StrategyChoice::Textual);

    let report = inst.run(&from_existing("lora-03", "04", "lulu-15")).unwrap();

    assert_eq!(report.destination_path, ws.folder("lora-04"));
    assert_eq!(report.identifier.to_string(), "lora-04");
    assert_eq!(report.strategy_used, StrategyKind::Fallback);
    assert_eq!(report.documents_rewritten.len(), 3);
    assert!(report.documents_skipped.is_empty());
    assert_eq!(inst.phase(), Phase::Done);

    let config = ws.read_json("lora-04", "config.json");
    assert_eq!(config["--output_dir"], "output/lora/04");
    assert_eq!(config["--tracker_run_name"], "lora-04");
    assert_eq!(config["--validation_prompt"], "a photo of lora");

    let backends = ws.read_json("lora-04", "multidatabackend.json");
    assert_eq!(backends[0]["instance_data_dir"], "datasets/lulu-15");
    assert_eq!(backends[0]["cache_dir_vae"], "cache/vae/lora-lulu-15/1024");
    assert_eq!(backends[1]["cache_dir_vae"], "cache/vae/lora-lulu-15/768");
    assert_eq!(
        backends[2],
        json!({
            "id": "text_embeds",
            "type": "local",
            "dataset_type": "text_embeds",
            "default": true,
            "cache_dir": "cache/text/lora-lulu-15"
        })
    );

    // Same token: prompt library keeps its keys
    assert_eq!(
        fs::read_to_string(ws.folder("lora-04").join("user_prompt_library.json")).unwrap(),
        PROMPTS_JSON
    );
    assert!(!ws.folder("lora-04").join(".ipynb_checkpoints").exists());
}

#[cfg(feature = "structured")]
#[test]
fn test_strategies_agree_on_conventional_files() {
    init_test_logging();
    let ws = workspace().unwrap();

    let structured = instantiator(&ws.roots, StrategyChoice::Structured)
        .run(&from_existing("lora-03", "04", "lulu-15"))
        .unwrap();
    assert_eq!(structured.strategy_used, StrategyKind::Structured);

    instantiator(&ws.roots, StrategyChoice::Textual)
        .run(&from_existing("lora-03", "05", "lulu-15"))
        .unwrap();

    for file in ["multidatabackend.json", "user_prompt_library.json"] {
        assert_eq!(ws.read_json("lora-04", file), ws.read_json("lora-05", file), "{}", file);
    }
    assert_eq!(
        ws.read_json("lora-04", "config.json")["--learning_rate"],
        ws.read_json("lora-05", "config.json")["--learning_rate"]
    );
}

#[test]
fn test_existing_destination_writes_nothing() {
    let ws = workspace().unwrap();
    fs::create_dir_all(ws.folder("lora-04")).unwrap();
    let before = tree_snapshot(ws.dir.path());

    let mut inst = instantiator(&ws.roots, StrategyChoice::Auto);
    let err = inst.run(&from_existing("lora-03", "04", "lulu-15")).unwrap_err();

    assert!(matches!(err, TuneconfError::DestinationExists(_)));
    assert_eq!(inst.phase(), Phase::Failed);
    assert_eq!(tree_snapshot(ws.dir.path()), before);
}

#[cfg(feature = "structured")]
#[test]
fn test_unparseable_document_is_skipped_and_kept() {
    let ws = workspace().unwrap();
    let broken = "{\"portrait_lora\": ";
    fs::write(ws.folder("lora-03").join("user_prompt_library.json"), broken).unwrap();

    let report = instantiator(&ws.roots, StrategyChoice::Structured)
        .run(&from_existing("lora-03", "04", "lulu-15"))
        .unwrap();

    assert_eq!(
        report.documents_rewritten,
        BTreeSet::from(["config.json".to_string(), "multidatabackend.json".to_string()])
    );
    assert!(report.documents_skipped.contains_key("user_prompt_library.json"));
    assert_eq!(
        fs::read_to_string(ws.folder("lora-04").join("user_prompt_library.json")).unwrap(),
        broken
    );
    assert_eq!(
        ws.read_json("lora-04", "multidatabackend.json")[0]["instance_data_dir"],
        "datasets/lulu-15"
    );
}

#[test]
fn test_template_instantiation_fills_placeholders() {
    let ws = workspace().unwrap();
    let mut inst = instantiator(&ws.roots, StrategyChoice::Auto);

    let report = inst
        .run(&InstantiationRequest {
            source: SourceSpec::Template {
                kind: TemplateKind::Lokr,
                token: "mira".to_string(),
            },
            version: "01".to_string(),
            dataset: DatasetSpec::Select(Selection::parse("beach")),
        })
        .unwrap();
    assert_eq!(report.destination_path, ws.folder("mira-01"));

    let config = ws.read_json("mira-01", "config.json");
    assert_eq!(config["--output_dir"], "output/mira/01");
    assert_eq!(config["--tracker_run_name"], "mira-01");
    assert_eq!(config["--validation_prompt"], "a photo of mira");

    let backends = ws.read_json("mira-01", "multidatabackend.json");
    assert_eq!(backends[0]["instance_data_dir"], "datasets/beach");
    assert_eq!(backends[0]["cache_dir_vae"], "cache/vae/mira-beach/1024");
    assert_eq!(backends[1]["cache_dir"], "cache/text/mira-beach");

    assert_eq!(
        ws.read_json("mira-01", "user_prompt_library.json"),
        json!({
            "mira portrait": "a portrait of mira",
            "closeup": "a closeup of mira"
        })
    );

    // The template itself is untouched
    let template_config =
        fs::read_to_string(ws.roots.templates_root.join("lokr/config.json")).unwrap();
    assert!(template_config.contains("__TOKEN_NAME__"));
}

#[test]
fn test_renamed_token_updates_prompt_keys_only() {
    let ws = workspace().unwrap();
    let mut inst = instantiator(&ws.roots, StrategyChoice::Auto);

    inst.run(&InstantiationRequest {
        source: SourceSpec::Existing {
            selection: Selection::Index(1),
            token: Some("mira".to_string()),
        },
        version: "01".to_string(),
        dataset: DatasetSpec::Reuse,
    })
    .unwrap();

    assert_eq!(
        ws.read_json("mira-01", "user_prompt_library.json"),
        json!({
            "portrait_mira": "a portrait of lora",
            "landscape": "a landscape"
        })
    );
    let config = ws.read_json("mira-01", "config.json");
    assert_eq!(config["--output_dir"], "output/mira/01");
    assert_eq!(config["--tracker_run_name"], "mira-01");

    let backends = ws.read_json("mira-01", "multidatabackend.json");
    assert_eq!(backends[0]["instance_data_dir"], "datasets/old-set");
    assert_eq!(backends[2]["cache_dir"], "cache/text/mira-old-set");
}

#[test]
fn test_missing_template_is_unavailable() {
    let ws = workspace().unwrap();
    fs::remove_dir_all(ws.roots.templates_root.join("lora")).unwrap();
    let mut inst = instantiator(&ws.roots, StrategyChoice::Auto);

    let err = inst
        .plan(&InstantiationRequest {
            source: SourceSpec::Template {
                kind: TemplateKind::Lora,
                token: "mira".to_string(),
            },
            version: "01".to_string(),
            dataset: DatasetSpec::Select(Selection::Index(1)),
        })
        .unwrap_err();
    assert!(matches!(err, TuneconfError::CatalogUnavailable { .. }));
    assert!(err.is_admission());
}

#[test]
fn test_report_serializes_for_json_output() {
    let ws = workspace().unwrap();
    let report = instantiator(&ws.roots, StrategyChoice::Textual)
        .run(&from_existing("1", "04", "2"))
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["identifier"], json!({"token": "lora", "version": "04"}));
    assert_eq!(value["strategy_used"], "fallback");
    assert_eq!(value["dataset"]["name"], "lulu-15");
    assert!(value["run_id"].is_string());
    assert!(value["documents_rewritten"].is_array());
}
