fn main() { kdots_tasks::entry_points::gauge_fix() }
