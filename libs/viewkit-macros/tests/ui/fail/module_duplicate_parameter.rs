use viewkit::module;

#[module(imports = [], imports = [])]
struct AppModule;

fn main() {}
