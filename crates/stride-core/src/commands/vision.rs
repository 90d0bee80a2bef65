use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::instrument;

use crate::cli::VisionCommand;
use crate::commands::Ctx;
use crate::remote::{self, Backend};
use crate::render::short_id;
use crate::session::Session;

#[instrument(skip(ctx, action))]
pub fn dispatch(ctx: &mut Ctx, action: VisionCommand) -> anyhow::Result<()> {
    let backend = ctx.backend()?;
    let session = ctx.require_session(&backend)?;

    match action {
        VisionCommand::List => {
            let images = backend.list_vision_images(&session)?;
            ctx.renderer.print_vision_images(&images)?;
        }
        VisionCommand::Add { file } => add(ctx, &backend, &session, &file)?,
        VisionCommand::Rm { id } => rm(&backend, &session, &id)?,
    }

    Ok(())
}

fn add(ctx: &Ctx, backend: &Backend, session: &Session, file: &Path) -> anyhow::Result<()> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid file path: {}", file.display()))?;

    let metadata = fs::metadata(file)
        .with_context(|| format!("failed to stat {}", file.display()))?;
    let (extension, content_type) = remote::validate_image_upload(file_name, metadata.len())?;

    let bytes = fs::read(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let object_path = remote::vision_object_path(session.user_id, ctx.now, &extension);
    let public_url = backend.upload_vision_object(session, &object_path, &content_type, bytes)?;
    let image = backend.add_vision_image(session, &public_url)?;

    println!("added image {} -> {}", short_id(image.id), image.image_url);
    Ok(())
}

fn rm(backend: &Backend, session: &Session, id: &str) -> anyhow::Result<()> {
    let images = backend.list_vision_images(session)?;
    let image = crate::commands::resolve_by_id(&images, id, |i| i.id, "image")?;

    backend.delete_vision_image(session, image.id)?;

    // The row is the source of truth; the stored object is cleaned up
    // best-effort afterwards.
    if let Some(object_path) = remote::object_path_from_url(&image.image_url) {
        backend.delete_vision_object(session, &object_path);
    }

    println!("removed image {}", short_id(image.id));
    Ok(())
}
