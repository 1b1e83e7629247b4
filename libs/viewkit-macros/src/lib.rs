use heck::ToSnakeCase;
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, punctuated::Punctuated, Data, DeriveInput,
    Expr, Fields, GenericArgument, Ident, Lit, LitBool, LitStr, Meta, Path, PathArguments, Token,
    Type,
};

// ============================================================================
// Shared parsing helpers
// ============================================================================

fn suggest_similar(input: &str, valid: &[&'static str]) -> Vec<&'static str> {
    let mut suggestions: Vec<(&str, f64)> = valid
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(input, key)))
        .filter(|(_, score)| *score > 0.6) // Only suggest if reasonably similar
        .collect();

    suggestions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    suggestions
        .into_iter()
        .take(2)
        .map(|(key, _)| key)
        .collect()
}

fn unknown_parameter(meta: &Meta, valid: &[&'static str]) -> syn::Error {
    let name = meta
        .path()
        .get_ident()
        .map(|i| i.to_string())
        .unwrap_or_default();
    let suggestions = suggest_similar(&name, valid);
    let msg = if suggestions.is_empty() {
        format!(
            "unknown attribute parameter '{name}', expected one of: {}",
            valid.join(", ")
        )
    } else {
        format!(
            "unknown attribute parameter '{name}'; did you mean one of: {}?",
            suggestions.join(", ")
        )
    };
    syn::Error::new_spanned(meta, msg)
}

/// Rejects a second occurrence of `key`.
fn first_use(seen: &mut Vec<String>, path: &Path, key: &str) -> syn::Result<()> {
    if seen.iter().any(|k| k == key) {
        return Err(syn::Error::new_spanned(
            path,
            format!("duplicate `{key}` parameter"),
        ));
    }
    seen.push(key.to_string());
    Ok(())
}

/// `[A, B, path::C]` as a list of type paths.
fn parse_type_list(value: Expr, key: &str) -> syn::Result<Vec<Path>> {
    let Expr::Array(arr) = value else {
        return Err(syn::Error::new_spanned(
            value,
            format!("{key} must be an array of types, e.g. {key} = [FooService]"),
        ));
    };
    arr.elems
        .into_iter()
        .map(|elem| match elem {
            Expr::Path(p) => Ok(p.path),
            other => Err(syn::Error::new_spanned(
                other,
                format!("{key} entries must be type paths"),
            )),
        })
        .collect()
}

/// An injection key written in an attribute: a type or a string token.
enum TokenItem {
    Class(Path),
    Name(LitStr),
}

impl TokenItem {
    fn to_tokens(&self) -> proc_macro2::TokenStream {
        match self {
            TokenItem::Class(p) => quote! { ::viewkit::Token::of::<#p>() },
            TokenItem::Name(s) => quote! { ::viewkit::Token::from(#s) },
        }
    }
}

/// `[FooService, "api.url"]` as a list of tokens.
fn parse_token_list(value: Expr, key: &str) -> syn::Result<Vec<TokenItem>> {
    let Expr::Array(arr) = value else {
        return Err(syn::Error::new_spanned(
            value,
            format!("{key} must be an array, e.g. {key} = [FooService, \"api.url\"]"),
        ));
    };
    arr.elems
        .into_iter()
        .map(|elem| match elem {
            Expr::Path(p) => Ok(TokenItem::Class(p.path)),
            Expr::Lit(syn::ExprLit {
                lit: Lit::Str(s), ..
            }) => Ok(TokenItem::Name(s)),
            other => Err(syn::Error::new_spanned(
                other,
                format!("{key} entries must be type paths or string literals"),
            )),
        })
        .collect()
}

fn parse_bool_flag(meta: Meta, key: &str) -> syn::Result<bool> {
    match meta {
        Meta::Path(_) => Ok(true),
        Meta::NameValue(nv) => match nv.value {
            Expr::Lit(syn::ExprLit {
                lit: Lit::Bool(LitBool { value, .. }),
                ..
            }) => Ok(value),
            other => Err(syn::Error::new_spanned(
                other,
                format!("{key} must be a bool literal (true/false) or a bare flag"),
            )),
        },
        Meta::List(list) => Err(syn::Error::new_spanned(
            list,
            format!("{key} takes no arguments"),
        )),
    }
}

fn registrator_ident(ident: &Ident, kind: &str) -> Ident {
    format_ident!("__{}_{}_registrator", ident.to_string().to_snake_case(), kind)
}

fn reject_generics(input: &DeriveInput, what: &str) -> syn::Result<()> {
    if input.generics.params.is_empty() {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            &input.generics,
            format!("{what} cannot be applied to generic types"),
        ))
    }
}

// ============================================================================
// #[module(...)]
// ============================================================================

/// Configuration parsed from #[module(...)] attribute
struct ModuleConfig {
    imports: Vec<Path>,
    providers: Vec<Path>,
    components: Vec<Path>,
    exports: Vec<TokenItem>,
    global: bool,
    routes: Option<Expr>,
}

impl ModuleConfig {
    const VALID_PARAMS: &'static [&'static str] = &[
        "imports",
        "providers",
        "components",
        "exports",
        "global",
        "routes",
    ];
}

impl Parse for ModuleConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut cfg = ModuleConfig {
            imports: Vec::new(),
            providers: Vec::new(),
            components: Vec::new(),
            exports: Vec::new(),
            global: false,
            routes: None,
        };
        let mut seen = Vec::new();

        let punctuated: Punctuated<Meta, Token![,]> =
            input.parse_terminated(Meta::parse, Token![,])?;

        for meta in punctuated {
            let key = meta
                .path()
                .get_ident()
                .map(|i| i.to_string())
                .unwrap_or_default();
            match (key.as_str(), meta) {
                ("imports", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "imports")?;
                    cfg.imports = parse_type_list(nv.value, "imports")?;
                }
                ("providers", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "providers")?;
                    cfg.providers = parse_type_list(nv.value, "providers")?;
                }
                ("components", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "components")?;
                    cfg.components = parse_type_list(nv.value, "components")?;
                }
                ("exports", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "exports")?;
                    cfg.exports = parse_token_list(nv.value, "exports")?;
                }
                ("routes", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "routes")?;
                    cfg.routes = Some(nv.value);
                }
                ("global", meta) => {
                    first_use(&mut seen, meta.path(), "global")?;
                    cfg.global = parse_bool_flag(meta, "global")?;
                }
                (_, other) => return Err(unknown_parameter(&other, Self::VALID_PARAMS)),
            }
        }

        Ok(cfg)
    }
}

/// Registers a module: `#[module(imports = [..], providers = [..],
/// components = [..], exports = [..], global, routes = expr)]`.
///
/// Value and deferred imports are not expressible here; register such
/// modules with `RegistryBuilder::module` directly.
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = parse_macro_input!(attr as ModuleConfig);
    let input = parse_macro_input!(item as DeriveInput);
    if let Err(e) = reject_generics(&input, "#[module]") {
        return e.to_compile_error().into();
    }

    let ident = &input.ident;
    let registrator = registrator_ident(ident, "module");

    let imports = &config.imports;
    let providers = &config.providers;
    let components = &config.components;
    let exports = config.exports.iter().map(TokenItem::to_tokens);
    let routes = config.routes.as_ref().map(|r| quote! { .routes(#r) });
    let global = config.global.then(|| quote! { b.global::<#ident>(); });

    let expanded = quote! {
        #input

        #[doc(hidden)]
        fn #registrator(b: &mut ::viewkit::registry::RegistryBuilder) {
            let opts = ::viewkit::ModuleOptions::new()
                #( .import(::viewkit::class::<#imports>()) )*
                #( .provider(::viewkit::class::<#providers>()) )*
                #( .component(::viewkit::class::<#components>()) )*
                #( .export(#exports) )*
                #routes;
            b.module::<#ident>(opts);
            #global
        }

        ::viewkit::inventory::submit! {
            ::viewkit::registry::Registrator(#registrator)
        }
    };

    TokenStream::from(expanded)
}

// ============================================================================
// #[component(...)]
// ============================================================================

struct ComponentConfig {
    factory: Expr,
    declarations: Vec<TokenItem>,
    lazy: bool,
    styles: Vec<LitStr>,
    interceptors: Vec<Path>,
}

impl ComponentConfig {
    const VALID_PARAMS: &'static [&'static str] =
        &["factory", "declarations", "lazy", "styles", "interceptors"];
}

impl Parse for ComponentConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut factory: Option<Expr> = None;
        let mut declarations = Vec::new();
        let mut lazy = false;
        let mut styles = Vec::new();
        let mut interceptors = Vec::new();
        let mut seen = Vec::new();

        let punctuated: Punctuated<Meta, Token![,]> =
            input.parse_terminated(Meta::parse, Token![,])?;

        for meta in punctuated {
            let key = meta
                .path()
                .get_ident()
                .map(|i| i.to_string())
                .unwrap_or_default();
            match (key.as_str(), meta) {
                ("factory", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "factory")?;
                    factory = Some(nv.value);
                }
                ("declarations", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "declarations")?;
                    declarations = parse_token_list(nv.value, "declarations")?;
                }
                ("interceptors", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "interceptors")?;
                    interceptors = parse_type_list(nv.value, "interceptors")?;
                }
                ("styles", Meta::NameValue(nv)) => {
                    first_use(&mut seen, &nv.path, "styles")?;
                    let Expr::Array(arr) = nv.value else {
                        return Err(syn::Error::new_spanned(
                            nv.value,
                            "styles must be an array of string literals",
                        ));
                    };
                    for elem in arr.elems {
                        match elem {
                            Expr::Lit(syn::ExprLit {
                                lit: Lit::Str(s), ..
                            }) => styles.push(s),
                            other => {
                                return Err(syn::Error::new_spanned(
                                    other,
                                    "styles entries must be string literals",
                                ))
                            }
                        }
                    }
                }
                ("lazy", meta) => {
                    first_use(&mut seen, meta.path(), "lazy")?;
                    lazy = parse_bool_flag(meta, "lazy")?;
                }
                (_, other) => return Err(unknown_parameter(&other, Self::VALID_PARAMS)),
            }
        }

        let factory = factory.ok_or_else(|| {
            syn::Error::new(
                Span::call_site(),
                "factory parameter is required, e.g. #[component(factory = ComponentFactory::value(\"<app/>\"))]",
            )
        })?;

        Ok(ComponentConfig {
            factory,
            declarations,
            lazy,
            styles,
            interceptors,
        })
    }
}

/// Registers a component: `#[component(factory = expr, declarations = [..],
/// lazy, styles = [..], interceptors = [..])]`.
///
/// `factory` must evaluate to a `viewkit::ComponentFactory`.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = parse_macro_input!(attr as ComponentConfig);
    let input = parse_macro_input!(item as DeriveInput);
    if let Err(e) = reject_generics(&input, "#[component]") {
        return e.to_compile_error().into();
    }

    let ident = &input.ident;
    let registrator = registrator_ident(ident, "component");
    let factory = &config.factory;

    let declarations = (!config.declarations.is_empty()).then(|| {
        let tokens = config.declarations.iter().map(TokenItem::to_tokens);
        quote! { .declarations([ #(#tokens),* ]) }
    });
    let lazy = config.lazy.then(|| quote! { .lazy(true) });
    let styles = (!config.styles.is_empty()).then(|| {
        let styles = &config.styles;
        quote! { .styles([ #(#styles),* ]) }
    });
    let interceptors = (!config.interceptors.is_empty()).then(|| {
        let classes = &config.interceptors;
        quote! {
            b.use_interceptors::<#ident>([ #( ::viewkit::class::<#classes>() ),* ]);
        }
    });

    let expanded = quote! {
        #input

        #[doc(hidden)]
        fn #registrator(b: &mut ::viewkit::registry::RegistryBuilder) {
            let opts = ::viewkit::ComponentOptions::new(#factory)
                #declarations
                #lazy
                #styles;
            b.component::<#ident>(opts);
            #interceptors
        }

        ::viewkit::inventory::submit! {
            ::viewkit::registry::Registrator(#registrator)
        }
    };

    TokenStream::from(expanded)
}

// ============================================================================
// #[derive(Injectable)]
// ============================================================================

/// How one field is filled.
enum FieldInject {
    /// `Arc<T>` field: positional dependency on `T`.
    Class(Type),
    /// `#[inject("token")]`: positional dependency on a named token.
    Named(Type, LitStr),
    /// `#[inject(property = "token")]`: keyed property dependency.
    Property(Type, LitStr),
    /// `#[inject(skip)]`: `Default::default()`.
    Skip,
}

fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(tp) = ty else {
        return None;
    };
    let seg = tp.path.segments.last()?;
    if seg.ident != "Arc" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(t) => Some(t),
        _ => None,
    }
}

fn parse_field(field: &syn::Field) -> syn::Result<FieldInject> {
    let mut mode: Option<FieldInject> = None;
    let inner = || {
        arc_inner(&field.ty).cloned().ok_or_else(|| {
            syn::Error::new_spanned(
                &field.ty,
                "injected fields must be `Arc<T>`; use #[inject(skip)] for fields built with Default",
            )
        })
    };

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("inject")) {
        if mode.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate #[inject] attribute"));
        }
        let expr: Expr = attr.parse_args()?;
        mode = Some(match expr {
            Expr::Lit(syn::ExprLit {
                lit: Lit::Str(s), ..
            }) => FieldInject::Named(inner()?, s),
            Expr::Path(p) if p.path.is_ident("skip") => FieldInject::Skip,
            Expr::Assign(assign) => {
                let is_property = matches!(&*assign.left, Expr::Path(p) if p.path.is_ident("property"));
                match (*assign.right, is_property) {
                    (
                        Expr::Lit(syn::ExprLit {
                            lit: Lit::Str(s), ..
                        }),
                        true,
                    ) => FieldInject::Property(inner()?, s),
                    (other, _) => {
                        return Err(syn::Error::new_spanned(
                            other,
                            "expected property = \"token\"",
                        ))
                    }
                }
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected #[inject(\"token\")], #[inject(property = \"token\")] or #[inject(skip)]",
                ))
            }
        });
    }

    match mode {
        Some(m) => Ok(m),
        None => Ok(FieldInject::Class(inner()?)),
    }
}

/// Struct-level `#[injectable(...)]` options.
#[derive(Default)]
struct InjectableOptions {
    interceptor: bool,
    manual: bool,
}

impl InjectableOptions {
    const VALID_PARAMS: &'static [&'static str] = &["interceptor", "manual"];

    fn from_attrs(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut opts = InjectableOptions::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("injectable")) {
            let metas: Punctuated<Meta, Token![,]> =
                attr.parse_args_with(Punctuated::parse_terminated)?;
            for meta in metas {
                match meta {
                    Meta::Path(p) if p.is_ident("interceptor") => opts.interceptor = true,
                    Meta::Path(p) if p.is_ident("manual") => opts.manual = true,
                    other => return Err(unknown_parameter(&other, Self::VALID_PARAMS)),
                }
            }
        }
        Ok(opts)
    }
}

/// Implements `viewkit::Injectable` from the struct's fields and registers
/// the type.
///
/// - `Arc<T>` fields are positional dependencies on `T`, in field order;
/// - `#[inject("token")]` makes the positional dependency a named token;
/// - `#[inject(property = "token")]` injects a keyed property instead;
/// - `#[inject(skip)]` fills the field with `Default::default()`.
///
/// `#[injectable(interceptor)]` registers the type as an interceptor (it must
/// implement `viewkit::Interceptor`); `#[injectable(manual)]` skips the
/// automatic registration.
#[proc_macro_derive(Injectable, attributes(inject, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_injectable(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn expand_injectable(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    reject_generics(input, "#[derive(Injectable)]")?;
    let opts = InjectableOptions::from_attrs(&input.attrs)?;
    let ident = &input.ident;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            ident,
            "Injectable can only be derived for structs",
        ));
    };

    let mut deps = Vec::new();
    let mut inits = Vec::new();
    for field in &data.fields {
        let value = match parse_field(field)? {
            FieldInject::Class(ty) => {
                deps.push(quote! { .param(::viewkit::class::<#ty>()) });
                quote! { args.next::<#ty>()? }
            }
            FieldInject::Named(ty, token) => {
                deps.push(quote! { .param(#token) });
                quote! { args.next::<#ty>()? }
            }
            FieldInject::Property(ty, token) => {
                let Some(name) = &field.ident else {
                    return Err(syn::Error::new_spanned(
                        field,
                        "property injection needs a named field",
                    ));
                };
                let key = LitStr::new(&name.to_string(), name.span());
                deps.push(quote! { .property(#key, #token) });
                quote! { args.property::<#ty>(#key)? }
            }
            FieldInject::Skip => quote! { ::core::default::Default::default() },
        };
        inits.push((field.ident.clone(), value));
    }

    let body = match &data.fields {
        Fields::Named(_) => {
            let fields = inits.iter().map(|(name, value)| quote! { #name: #value });
            quote! { Self { #(#fields),* } }
        }
        Fields::Unnamed(_) => {
            let values = inits.iter().map(|(_, value)| value);
            quote! { Self( #(#values),* ) }
        }
        Fields::Unit => quote! { Self },
    };

    let registration = if opts.manual {
        quote! {}
    } else {
        let registrator = registrator_ident(ident, "injectable");
        let call = if opts.interceptor {
            quote! { b.interceptor::<#ident>(); }
        } else {
            quote! { b.injectable::<#ident>(); }
        };
        quote! {
            #[doc(hidden)]
            fn #registrator(b: &mut ::viewkit::registry::RegistryBuilder) {
                #call
            }

            ::viewkit::inventory::submit! {
                ::viewkit::registry::Registrator(#registrator)
            }
        }
    };

    Ok(quote! {
        impl ::viewkit::Injectable for #ident {
            fn dependencies() -> ::viewkit::DependencyList {
                ::viewkit::DependencyList::new() #(#deps)*
            }

            #[allow(unused_variables)]
            fn construct(args: &mut ::viewkit::Args) -> ::viewkit::Result<Self> {
                ::core::result::Result::Ok(#body)
            }
        }

        #registration
    })
}
