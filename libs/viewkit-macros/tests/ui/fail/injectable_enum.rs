use viewkit::Injectable;

#[derive(Injectable)]
enum Mode {
    Fast,
}

fn main() {}
