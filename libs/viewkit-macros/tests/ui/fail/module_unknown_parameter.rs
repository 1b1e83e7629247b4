use viewkit::module;

#[module(improts = [])]
struct AppModule;

fn main() {}
