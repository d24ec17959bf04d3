use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::Parser;
use fs_err as fs;
use std::path::Path;

use blueprint::cli::{Args, Command};
use blueprint::controller::{self, BuildOutcome};
use blueprint::pipeline::Pipeline;
use blueprint::wire::DataUrl;
use blueprint::wizard::Session;
use blueprint::{apply, log, server, ux};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    log::init(args.debug);

    let mut cfg = args.resolve_config()?;
    cfg.load_api_key();
    let (bind, port) = (cfg.bind.clone(), cfg.port);
    let pipeline = Pipeline::from_config(cfg)?;

    match args.command {
        Command::Serve { .. } => server::run_serve(pipeline, &bind, port).await,
        Command::Run { intent, sketch, pick, out, auto_approve } => {
            let sketch_data = match sketch {
                Some(p) => sketch_data_url(&p)?,
                None => String::new(),
            };
            run_wizard(&pipeline, &intent, &sketch_data, pick, &out, auto_approve).await
        }
    }
}

fn sketch_data_url(path: &Path) -> Result<String> {
    let raw = fs::read(path)?;
    let mime_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    };
    let url = DataUrl {
        mime_type: mime_type.to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(raw),
    };
    Ok(url.to_url())
}

async fn run_wizard(
    pipeline: &Pipeline,
    intent: &str,
    sketch_data: &str,
    pick: Option<usize>,
    out: &Path,
    auto_approve: bool,
) -> Result<()> {
    let session = Session::new();
    if controller::submit_intent(&session, intent).redirect().is_none() {
        bail!("intent must not be blank");
    }

    // ===== CONCEPTS =====
    let pb = ux::spinner("Generating design concepts...");
    let res = controller::generate_concepts(&session, pipeline, sketch_data).await;
    pb.finish_and_clear();
    res?;

    let concepts = session.snapshot().concepts;
    ux::show_concepts(&concepts);

    let idx = match pick {
        Some(n) => n
            .checked_sub(1)
            .filter(|i| *i < concepts.len())
            .with_context(|| format!("--pick must be between 1 and {}", concepts.len()))?,
        None => match ux::pick(concepts.len()) {
            Some(i) => i,
            None => {
                println!("Aborted by user.");
                return Ok(());
            }
        },
    };
    let chosen = controller::select_concept(&session, &concepts[idx].id)?;
    println!("Selected: {}", chosen.name);
    controller::confirm_selection(&session);

    // ===== BUILD =====
    let pb = ux::spinner("Generating application code...");
    let outcome = controller::build(&session, pipeline).await;
    pb.finish_and_clear();
    match outcome? {
        BuildOutcome::Built { .. } => {}
        BuildOutcome::Fallback { error } => println!("Code generation failed ({error}); writing the error app."),
        BuildOutcome::Skipped { reason } => bail!("build skipped: {reason}"),
        BuildOutcome::Discarded => bail!("build discarded"),
    }

    let bundle = session.snapshot().generated_code;
    ux::print_bundle(&bundle);

    let preview = apply::write_bundle(out, &bundle, true)?;
    if preview.updated > 0 && !auto_approve && !ux::confirm(&format!("Overwrite {} file(s) in {}?", preview.updated, out.display())) {
        println!("Aborted by user.");
        return Ok(());
    }
    let summary = apply::write_bundle(out, &bundle, false)?;
    ux::print_apply_dashboard(&summary);
    Ok(())
}
