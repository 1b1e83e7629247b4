//! End-to-end resolution of the demo shop graph.

use std::sync::Arc;

use demo_shop::domain::{CartError, CartService, CatalogService, PriceFormatter};
use demo_shop::{
    AccessLog, AppModule, CartPage, CatalogModule, Markup, MarkupPlatform, ProductDetailsPage,
    ProductListPage, ShopShell, STORE_NAME,
};
use viewkit::{class, Factory, FactoryConfig, MetadataRegistry, RouterModule};

async fn create(root: viewkit::ClassId) -> (Factory, Arc<viewkit::ComponentInstance>) {
    let registry = MetadataRegistry::discover().expect("registry builds");
    let mut factory = Factory::new(registry)
        .with_platform(Arc::new(MarkupPlatform))
        .with_config(FactoryConfig {
            resolve_timeout: Some(std::time::Duration::from_secs(5)),
            log_dependency_maps: true,
        });
    let root = factory.create(root).await.expect("create");
    (factory, root)
}

fn markup(value: Option<viewkit::ComponentValue>) -> String {
    value
        .and_then(|v| v.downcast_ready::<Markup>())
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[tokio::test]
async fn app_root_resolves_to_the_shell() {
    let (factory, root) = create(class::<AppModule>()).await;

    assert_eq!(root.class(), class::<ShopShell>());
    assert_eq!(markup(root.component()), "<shop-shell data-component=\"ShopShell\"/>");
    assert_eq!(
        factory.registry().module_by_name("AppModule"),
        Some(class::<AppModule>())
    );

    let modules: Vec<_> = factory
        .module_instance_map()
        .values()
        .map(|m| m.name())
        .collect();
    assert_eq!(modules.len(), 3);
    assert!(modules.contains(&"CoreModule"));
    assert!(factory
        .root_module_instance()
        .is_some_and(|m| m.class() == class::<AppModule>()));
}

#[tokio::test]
async fn shell_dependencies_include_generated_store_name() {
    let (factory, root) = create(class::<AppModule>()).await;
    let deps = factory.generate_dependency_map(&root).expect("deps");

    assert_eq!(
        deps.named::<String>(STORE_NAME).as_deref().map(String::as_str),
        Some("Demo Shop (EUR)")
    );

    let cart = deps.provider::<CartService>().expect("cart service");
    cart.add(3, 1).unwrap();
    cart.add(1, 2).unwrap();
    cart.add(1, 1).unwrap();
    assert_eq!(cart.lines().len(), 2);
    assert_eq!(cart.total_cents(), 12_900 + 3 * 900);
    assert_eq!(cart.summary(), "4 items, 156.00 EUR");
    assert_eq!(cart.add(99, 1), Err(CartError::UnknownProduct(99)));
    assert_eq!(cart.add(1, 0), Err(CartError::ZeroQuantity));
}

#[tokio::test]
async fn providers_are_shared_across_components() {
    let (factory, _root) = create(class::<AppModule>()).await;

    let list = factory
        .generate_dependency_map(class::<ProductListPage>())
        .expect("list deps");
    let catalog = list.provider::<CatalogService>().expect("catalog");
    let formatter = list.provider::<PriceFormatter>().expect("formatter");

    assert!(Arc::ptr_eq(catalog.formatter(), &formatter));
    assert!(Arc::ptr_eq(
        &catalog,
        &factory.provider::<CatalogService>().expect("catalog provider")
    ));
    assert_eq!(formatter.currency(), "EUR");
    assert_eq!(catalog.label(2).as_deref(), Some("Pour-over kettle - 44.50 EUR"));
}

#[tokio::test]
async fn cart_page_sees_exported_component_and_global_values() {
    let (factory, _root) = create(class::<AppModule>()).await;
    let deps = factory
        .generate_dependency_map(class::<CartPage>())
        .expect("cart deps");

    assert_eq!(
        markup(deps.component::<ProductListPage>()),
        "<product-list data-component=\"ProductListPage\"/>"
    );
    assert_eq!(
        deps.named::<String>("currency").as_deref().map(String::as_str),
        Some("EUR")
    );
    assert!(deps.provider::<AccessLog>().is_some());
}

#[tokio::test]
async fn lazy_details_page_loads_on_demand() {
    let (factory, _root) = create(class::<AppModule>()).await;
    let details = factory
        .component_instance(class::<ProductDetailsPage>())
        .expect("details instance");

    let value = details.component().expect("details value");
    assert!(value.is_lazy());
    let rendered = value.resolve().await.expect("resolves");
    let rendered = rendered.downcast::<Markup>().expect("markup");
    assert_eq!(rendered.as_str(), "<product-details/>");
}

#[tokio::test]
async fn access_log_runs_for_intercepted_components() {
    let (factory, root) = create(class::<AppModule>()).await;
    let cart_page = factory
        .component_instance(class::<CartPage>())
        .expect("cart page");

    root.intercept().await.unwrap();
    cart_page.intercept().await.unwrap();
    root.intercept().await.unwrap();

    let log = factory.provider::<AccessLog>().expect("access log");
    assert_eq!(log.hits(), 3);
    assert!(factory
        .component_instance(class::<ProductListPage>())
        .is_some_and(|c| c.interceptors().is_empty()));
}

#[tokio::test]
async fn routes_flatten_the_mounted_catalog() {
    let (factory, _root) = create(class::<AppModule>()).await;
    let routes = RouterModule::root_routes(&factory).expect("routes");

    let flat: Vec<_> = routes.iter().flat_map(|r| r.flatten()).collect();
    assert_eq!(
        flat,
        vec![
            ("/".to_string(), "ShopShell"),
            ("/cart".to_string(), "CartPage"),
            ("/products".to_string(), "ProductListPage"),
            ("/products/:id".to_string(), "ProductDetailsPage"),
        ]
    );
}

#[tokio::test]
async fn catalog_alone_is_a_valid_root() {
    let (factory, root) = create(class::<CatalogModule>()).await;

    assert_eq!(root.class(), class::<ProductListPage>());
    assert!(factory.provider::<CartService>().is_none());
    assert!(factory.component_instance(class::<ShopShell>()).is_none());

    let routes = RouterModule::root_routes(&factory).expect("routes");
    let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/:id"]);
}
