// Module with every list parameter, a global flag and routes
use viewkit::{module, ComponentFactory, RouteOptions};

#[viewkit::component(factory = ComponentFactory::value("<shell/>"))]
pub struct Shell;

#[module(providers = [], exports = ["theme"], global = false)]
pub struct ThemeModule;

#[module(
    imports = [ThemeModule],
    components = [Shell],
    exports = [Shell],
    global,
    routes = [RouteOptions::component::<Shell>("/")]
)]
pub struct ShellModule;

fn main() {}
