use viewkit::Injectable;

#[derive(Injectable)]
struct Clock {
    zone: String,
}

fn main() {}
