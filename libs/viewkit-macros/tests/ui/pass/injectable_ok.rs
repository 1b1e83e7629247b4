// Named, tuple and unit injectables, including an interceptor
use std::sync::Arc;

use viewkit::{Injectable, Interceptor};

#[derive(Injectable)]
pub struct Clock;

#[derive(Injectable)]
pub struct Pair(Arc<Clock>, #[inject("tz")] Arc<String>);

#[derive(Injectable)]
pub struct Greeter {
    clock: Arc<Clock>,
    #[inject(property = "greeting")]
    greeting: Arc<String>,
    #[inject(skip)]
    count: u32,
}

#[derive(Injectable)]
#[injectable(manual)]
pub struct Unregistered;

#[derive(Injectable)]
#[injectable(interceptor)]
pub struct Guard;

#[viewkit::async_trait]
impl Interceptor for Guard {
    async fn intercept(&self, _component: &viewkit::ComponentInstance) -> anyhow::Result<()> {
        Ok(())
    }
}

fn main() {
    let _ = |g: Greeter, p: Pair| (g.clock, g.greeting, g.count, p.0, p.1);
}
