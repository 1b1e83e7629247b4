use viewkit::Injectable;

#[derive(Injectable)]
#[injectable(intercepter)]
struct Audit;

fn main() {}
