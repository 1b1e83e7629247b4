use std::sync::Arc;
use viewkit::Injectable;

#[derive(Injectable)]
struct Greeter {
    #[inject(42)]
    greeting: Arc<String>,
}

fn main() {}
