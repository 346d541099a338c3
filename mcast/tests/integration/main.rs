mod util;

mod test_invariants;
mod test_scenarios;
