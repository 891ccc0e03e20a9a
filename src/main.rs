use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    puzzle_curator::cli::run(std::env::args().skip(1))
}
