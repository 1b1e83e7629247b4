use viewkit::module;

#[module(providers = [])]
struct Holder<T>(T);

fn main() {}
