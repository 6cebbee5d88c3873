use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use cask_keys::{
    GitLikeKeyGenerator, HashedKeyGenerator, KeyContext, KeyGenerator, LegacyKeyGenerator,
    TenantAwareKeyGenerator,
};
use cask_sdk::{
    CaskConfig, Content, ContentId, ContentMetadata, ContentService, NewContent,
    NewDerivedContent, ObjectId, OwnerId, TenantId,
};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Key(args) => cmd_key(args, format),
        Command::Backends => cmd_backends(load_config(cli.config.as_deref())?, format),
        Command::Put(args) => cmd_put(args, load_config(cli.config.as_deref())?, format).await,
        Command::Tree(args) => cmd_tree(args, format).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CaskConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            CaskConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Ok(CaskConfig::default()),
    }
}

fn key_generator(args: &KeyArgs) -> anyhow::Result<Arc<dyn KeyGenerator>> {
    let base: Arc<dyn KeyGenerator> = match args.strategy {
        StrategyName::Legacy => Arc::new(LegacyKeyGenerator),
        StrategyName::GitLike => Arc::new(GitLikeKeyGenerator::new(args.shard_length)?),
        StrategyName::Hashed => Arc::new(HashedKeyGenerator::new(args.shard_length)?),
    };
    Ok(match args.tenant {
        Some(_) => Arc::new(TenantAwareKeyGenerator::new(base)),
        None => base,
    })
}

fn key_context(args: &KeyArgs) -> KeyContext {
    let mut ctx = match &args.derived {
        Some(kind) => KeyContext::derived(kind.clone(), args.variant.clone()),
        None => KeyContext::original(),
    };
    if let Some(name) = &args.file_name {
        ctx = ctx.with_file_name(name.clone());
    }
    if let Some(tenant) = &args.tenant {
        ctx = ctx.with_tenant(tenant.clone());
    }
    ctx
}

fn cmd_key(args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let content_id = match &args.content_id {
        Some(id) => id.parse::<ContentId>()?,
        None => ContentId::new(),
    };
    let object_id = match &args.object_id {
        Some(id) => id.parse::<ObjectId>()?,
        None => ObjectId::new(),
    };
    let generator = key_generator(&args)?;
    let key = generator.generate_key(&content_id, &object_id, &key_context(&args));

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "strategy": generator.name(),
                "content_id": content_id,
                "object_id": object_id,
                "key": key,
            })
        ),
        OutputFormat::Text => {
            println!("{}", key.bold());
            println!("  strategy: {}", generator.name().cyan());
            println!("  content:  {}", content_id.to_string().dimmed());
            println!("  object:   {}", object_id.to_string().dimmed());
        }
    }
    Ok(())
}

fn cmd_backends(config: CaskConfig, format: OutputFormat) -> anyhow::Result<()> {
    config.validate()?;
    match format {
        OutputFormat::Json => {
            let backends: Vec<_> = config
                .backends
                .iter()
                .map(|b| {
                    json!({
                        "name": b.name,
                        "type": b.backend.type_name(),
                        "default": b.name == config.default_backend,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&backends)?);
        }
        OutputFormat::Text => {
            println!("{}", "Backends:".bold());
            for b in &config.backends {
                let marker = if b.name == config.default_backend {
                    "*".green().bold().to_string()
                } else {
                    " ".to_string()
                };
                println!("{} {:<16} {}", marker, b.name.yellow(), b.backend.type_name());
            }
        }
    }
    Ok(())
}

async fn cmd_put(args: PutArgs, config: CaskConfig, format: OutputFormat) -> anyhow::Result<()> {
    let file_name = args
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);
    let Some(file_name) = file_name else {
        bail!("{} has no usable file name", args.path.display());
    };
    let mut file = tokio::fs::File::open(&args.path)
        .await
        .with_context(|| format!("failed to open {}", args.path.display()))?;

    let svc = ContentService::from_config(&config).await?;
    let name = args.name.unwrap_or_else(|| file_name.clone());
    let content = svc.create_content(NewContent::new(TenantId::new(), OwnerId::new(), name))?;

    let mut metadata = ContentMetadata::new(content.id).with_file_name(file_name.clone());
    if let Some(mime) = &args.mime_type {
        metadata = metadata.with_mime_type(mime.clone());
    }
    svc.set_content_metadata(metadata)?;

    let object = svc.create_object(content.id, args.backend.as_deref(), Some(&file_name))?;
    let object = svc
        .upload_object(object.id, &mut file, args.mime_type.as_deref())
        .await?;
    let size = svc
        .object_metadata(object.id)?
        .map(|m| m.size_bytes)
        .unwrap_or_default();

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "content_id": content.id,
                "object_id": object.id,
                "backend": object.backend_name,
                "key": object.object_key,
                "size_bytes": size,
                "status": object.status.as_str(),
            })
        ),
        OutputFormat::Text => {
            println!(
                "{} Stored {} ({} bytes) on {}",
                "✓".green().bold(),
                file_name.bold(),
                size,
                object.backend_name.yellow()
            );
            println!("  content: {}", content.id.to_string().cyan());
            println!("  object:  {}", object.id.to_string().cyan());
            println!("  key:     {}", object.object_key);
        }
    }
    Ok(())
}

/// Create a root with `levels` generations below it, `fan_out` children per
/// node. Returns the root id.
fn build_chain(svc: &ContentService, levels: u32, fan_out: u32) -> anyhow::Result<ContentId> {
    let tenant = TenantId::new();
    let owner = OwnerId::new();
    let root = svc.create_content(NewContent::new(tenant, owner, "original"))?;

    let mut frontier: Vec<Content> = vec![root.clone()];
    for level in 1..=levels {
        let mut next = Vec::with_capacity(frontier.len() * fan_out as usize);
        for parent in &frontier {
            for i in 0..fan_out {
                let name = format!("{}.{}", parent.name, i);
                let attrs = NewContent::new(tenant, owner, name);
                let request = NewDerivedContent::new(attrs, "derivative")
                    .with_variant(format!("level-{level}"))
                    .with_param("index", i);
                next.push(svc.create_derived_content(parent.id, request)?);
            }
        }
        frontier = next;
    }
    Ok(root.id)
}

async fn cmd_tree(args: TreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let svc = ContentService::from_config(&CaskConfig::default()).await?;
    let root = build_chain(&svc, args.levels, args.fan_out)?;
    let tree = svc.content_tree(root, args.max_depth)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        OutputFormat::Text => {
            for content in &tree {
                let indent = "  ".repeat(content.derivation_level as usize);
                let label = match svc.derived_relationship(content.id)? {
                    Some(rel) => format!(
                        "{}/{}",
                        rel.derivation_type,
                        rel.variant.as_deref().unwrap_or("-")
                    ),
                    None => "root".to_string(),
                };
                println!(
                    "{}{} {} {}",
                    indent,
                    content.name.bold(),
                    content.id.short_id().cyan(),
                    label.dimmed()
                );
            }
            println!("\n{} contents", tree.len().to_string().bold());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn key_args(argv: &[&str]) -> KeyArgs {
        let mut full = vec!["cask", "key"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Key(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn key_defaults_to_git_like() {
        let args = key_args(&["--file-name", "a.txt"]);
        let generator = key_generator(&args).unwrap();
        assert_eq!(generator.name(), "git_like");
        let key = generator.generate_key(&ContentId::new(), &ObjectId::new(), &key_context(&args));
        assert!(key.starts_with("originals/objects/"));
        assert!(key.ends_with("_a.txt"));
    }

    #[test]
    fn tenant_wraps_strategy() {
        let args = key_args(&["--strategy", "legacy", "--tenant", "acme"]);
        let key = key_generator(&args)
            .unwrap()
            .generate_key(&ContentId::new(), &ObjectId::new(), &key_context(&args));
        assert!(key.starts_with("tenants/acme/"));
    }

    #[test]
    fn derived_layout() {
        let args = key_args(&["--derived", "thumbnail", "--variant", "256x256"]);
        let key = key_generator(&args)
            .unwrap()
            .generate_key(&ContentId::new(), &ObjectId::new(), &key_context(&args));
        assert!(key.starts_with("derived/thumbnail/256x256/objects/"));
    }

    #[test]
    fn bad_shard_length_is_rejected() {
        let args = key_args(&["--shard-length", "0"]);
        assert!(key_generator(&args).is_err());
    }

    #[test]
    fn variant_requires_derived() {
        assert!(Cli::try_parse_from(["cask", "key", "--variant", "x"]).is_err());
    }

    #[tokio::test]
    async fn chain_tree_is_breadth_first() {
        let svc = ContentService::from_config(&CaskConfig::default()).await.unwrap();
        let root = build_chain(&svc, 2, 2).unwrap();
        let tree = svc.content_tree(root, 5).unwrap();
        assert_eq!(tree.len(), 7);
        let levels: Vec<u32> = tree.iter().map(|c| c.derivation_level).collect();
        assert_eq!(levels, vec![0, 1, 1, 2, 2, 2, 2]);
    }

    #[tokio::test]
    async fn chain_past_depth_limit_fails() {
        let svc = ContentService::from_config(&CaskConfig::default()).await.unwrap();
        assert!(build_chain(&svc, 6, 1).is_err());
    }
}
