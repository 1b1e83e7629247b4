//! Registration through the attribute and derive macros, discovered via
//! inventory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use viewkit::registry::{Metadata, Registrator, RegistryBuilder};
use viewkit::{
    async_trait, class, component, module, BasicProvider, ComponentFactory, ComponentInstance,
    Factory, Injectable, Interceptor, MetadataRegistry, ModuleOptions, RouteOptions, RouterModule,
    Token,
};

#[derive(Injectable)]
pub struct ClockService;

impl ClockService {
    fn now(&self) -> u64 {
        42
    }
}

#[derive(Injectable)]
pub struct GreetingService {
    clock: Arc<ClockService>,
    #[inject(property = "greeting")]
    greeting: Arc<String>,
    #[inject(skip)]
    calls: AtomicUsize,
}

impl GreetingService {
    fn greet(&self, who: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("{}, {who} @{}", self.greeting, self.clock.now())
    }
}

#[derive(Injectable)]
pub struct Locale(#[inject("locale")] Arc<&'static str>, Arc<ClockService>);

#[derive(Injectable)]
#[injectable(interceptor)]
pub struct AuditInterceptor {
    #[inject(skip)]
    seen: AtomicUsize,
}

#[async_trait]
impl Interceptor for AuditInterceptor {
    async fn intercept(&self, _component: &ComponentInstance) -> anyhow::Result<()> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[component(factory = ComponentFactory::value("<details/>"), lazy)]
pub struct DetailsPage;

#[component(
    factory = ComponentFactory::value("<home/>"),
    declarations = [GreetingService, Locale, DetailsPage, "greeting"],
    styles = ["home.css"],
    interceptors = [AuditInterceptor]
)]
pub struct HomePage;

#[module(
    providers = [ClockService],
    exports = [ClockService],
    global
)]
pub struct CoreModule;

pub struct SettingsModule;

fn register_settings(b: &mut RegistryBuilder) {
    b.module::<SettingsModule>(
        ModuleOptions::new()
            .provider(BasicProvider::value("greeting", String::from("Hello")))
            .provider(BasicProvider::value("locale", "en"))
            .import(class::<CoreModule>())
            .exports(["greeting", "locale"]),
    );
}

viewkit::inventory::submit! {
    Registrator(register_settings)
}

#[module(
    imports = [SettingsModule],
    providers = [GreetingService, Locale, AuditInterceptor],
    components = [HomePage, DetailsPage],
    exports = [HomePage],
    routes = [
        RouteOptions::component::<HomePage>("/"),
        RouteOptions::component::<DetailsPage>("/details"),
    ]
)]
pub struct AppModule;

#[test]
fn macros_register_every_kind() {
    let registry = MetadataRegistry::discover().expect("registry builds");

    let app = registry.module(class::<AppModule>()).expect("app module");
    assert_eq!(app.imports.len(), 1);
    assert!(registry.module(class::<SettingsModule>()).is_some());
    assert_eq!(app.providers.len(), 3);
    assert!(app.exports.contains(&Token::of::<HomePage>()));
    assert_eq!(app.routes.len(), 2);
    assert!(!app.global);

    let core = registry.module(class::<CoreModule>()).expect("core module");
    assert!(core.global);

    let home = registry.component(class::<HomePage>()).expect("home");
    assert_eq!(home.dependencies.params().len(), 4);
    assert_eq!(home.styles, vec!["home.css".to_string()]);
    assert_eq!(home.interceptors, vec![class::<AuditInterceptor>()]);
    assert!(!home.lazy);
    assert!(registry.component(class::<DetailsPage>()).expect("details").lazy);

    let greeting = registry
        .dependencies(class::<GreetingService>())
        .expect("greeting deps");
    assert_eq!(greeting.params(), &[Token::of::<ClockService>()]);
    assert_eq!(greeting.properties(), &[("greeting", Token::from("greeting"))]);

    let locale = registry.dependencies(class::<Locale>()).expect("locale deps");
    assert_eq!(
        locale.params(),
        &[Token::from("locale"), Token::of::<ClockService>()]
    );

    assert!(matches!(
        registry.get(class::<AuditInterceptor>()),
        Some(Metadata::Provider(p)) if p.is_interceptor()
    ));
    assert!(matches!(
        registry.get(class::<ClockService>()),
        Some(Metadata::Provider(p)) if !p.is_interceptor()
    ));
}

#[tokio::test]
async fn discovered_application_resolves() {
    let mut factory = Factory::new(MetadataRegistry::discover().expect("registry builds"));
    let root = factory.create(class::<AppModule>()).await.expect("create");
    assert_eq!(root.class(), class::<HomePage>());

    let deps = factory.generate_dependency_map(&root).expect("deps");
    let greeting = deps.provider::<GreetingService>().expect("greeting service");
    assert_eq!(greeting.greet("Ada"), "Hello, Ada @42");
    assert_eq!(greeting.calls.load(Ordering::SeqCst), 1);
    assert_eq!(deps.named::<String>("greeting").as_deref().map(String::as_str), Some("Hello"));

    let locale = deps.provider::<Locale>().expect("locale");
    assert_eq!(*locale.0, "en");
    assert!(Arc::ptr_eq(&locale.1, &greeting.clock));

    assert!(deps.component::<DetailsPage>().expect("details value").is_lazy());

    assert_eq!(root.interceptors().len(), 1);
    root.intercept().await.expect("intercept");
    let audit = factory.provider::<AuditInterceptor>().expect("audit");
    assert_eq!(audit.seen.load(Ordering::SeqCst), 1);

    let routes = RouterModule::root_routes(&factory).expect("routes");
    let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/details"]);
}
