use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use viewkit::{
    ComponentValue, Factory, MetadataRegistry, ModuleRef, RouterItem, RouterModule,
};
use viewkit_bootstrap::{AppConfig, CliArgs};

use std::path::PathBuf;
use std::sync::Arc;

// Ensure modules are linked and registered via inventory
#[allow(dead_code)]
fn _ensure_modules_linked() {
    let _ = std::any::type_name::<demo_shop::AppModule>();
    let _ = std::any::type_name::<demo_shop::CatalogModule>();
    let _ = std::any::type_name::<demo_shop::CoreModule>();
}

/// ViewKit CLI - resolve a module graph and print what it produced
#[derive(Parser)]
#[command(name = "viewkit-cli")]
#[command(about = "ViewKit CLI - resolve a module graph and print its components and routes")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root module type name (overrides app.root_module)
    #[arg(short, long)]
    root: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the root module and print components and routes
    Run,
    /// Resolve the root module and report success or the first error
    Check,
    /// List registered modules
    Modules,
}

#[tokio::main]
async fn main() -> Result<()> {
    _ensure_modules_linked();

    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        root: cli.root.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML (if provided) -> 3) env (VIEWKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    viewkit_bootstrap::init_logging_from_config(config.logging.as_ref(), &config.home_dir());

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let registry = Arc::new(MetadataRegistry::discover().context("Invalid registrations")?);
    tracing::info!(entries = registry.len(), "Registry built");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, registry).await,
        Commands::Check => check(config, registry).await,
        Commands::Modules => {
            list_modules(&registry);
            Ok(())
        }
    }
}

async fn resolve(config: &AppConfig, registry: Arc<MetadataRegistry>) -> Result<Factory> {
    let root = registry
        .module_by_name(&config.app.root_module)
        .ok_or_else(|| {
            let known: Vec<_> = registry.modules().map(|m| m.name()).collect();
            anyhow!(
                "Unknown root module '{}' (registered: {})",
                config.app.root_module,
                known.join(", ")
            )
        })?;

    let mut factory = Factory::new(registry)
        .with_platform(Arc::new(demo_shop::MarkupPlatform))
        .with_config(config.factory.clone());
    factory
        .create(root)
        .await
        .with_context(|| format!("Failed to resolve '{}'", config.app.root_module))?;
    Ok(factory)
}

async fn run(config: AppConfig, registry: Arc<MetadataRegistry>) -> Result<()> {
    let factory = resolve(&config, registry).await?;

    println!("Modules:");
    for module in factory.module_instance_map().values() {
        let imports: Vec<_> = module
            .imported_module_instances()
            .iter()
            .map(|m| m.name())
            .collect();
        let exports: Vec<_> = module.exports().iter().map(ToString::to_string).collect();
        println!(
            "  {}{} imports [{}] exports [{}]",
            module.name(),
            if module.is_global() { " (global)" } else { "" },
            imports.join(", "),
            exports.join(", ")
        );
    }

    println!("Components:");
    for (class, component) in factory.component_instance_map() {
        let deps = factory.generate_dependency_map(class)?;
        let tokens: Vec<_> = deps.tokens().map(ToString::to_string).collect();
        println!(
            "  {} [{}] {} deps [{}]",
            component.name(),
            component.uuid(),
            describe(component.component()),
            tokens.join(", ")
        );
    }

    println!("Routes:");
    for item in RouterModule::root_routes(&factory)? {
        print_route(&item, 1);
    }
    Ok(())
}

async fn check(config: AppConfig, registry: Arc<MetadataRegistry>) -> Result<()> {
    tracing::info!(root = %config.app.root_module, "Checking module graph…");
    let factory = resolve(&config, registry).await?;
    let routes = RouterModule::root_routes(&factory)?;
    println!(
        "Module graph is valid: {} modules, {} components, {} top-level routes",
        factory.module_instance_map().len(),
        factory.component_instance_map().len(),
        routes.len()
    );
    Ok(())
}

fn list_modules(registry: &MetadataRegistry) {
    let mut modules: Vec<_> = registry.modules().collect();
    modules.sort_by_key(|m| m.name());
    for m in modules {
        let imports: Vec<_> = m
            .imports
            .iter()
            .map(|i| match i {
                ModuleRef::Class(c) => c.to_string(),
                other => format!("{other:?}"),
            })
            .collect();
        println!(
            "{}{}: imports [{}], {} providers, {} components, {} routes",
            m.name(),
            if m.global { " (global)" } else { "" },
            imports.join(", "),
            m.providers.len(),
            m.components.len(),
            m.routes.len()
        );
    }
}

fn describe(value: Option<ComponentValue>) -> String {
    match value {
        None => "<not rendered>".to_string(),
        Some(v) if v.is_lazy() => "<lazy>".to_string(),
        Some(v) => v
            .downcast_ready::<demo_shop::Markup>()
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "<opaque>".to_string()),
    }
}

fn print_route(item: &RouterItem, depth: usize) {
    println!(
        "{:indent$}{} -> {}",
        "",
        item.path,
        item.component.name(),
        indent = depth * 2
    );
    for child in &item.children {
        print_route(child, depth + 1);
    }
}
