use viewkit::component;

#[component(lazy)]
struct Page;

fn main() {}
