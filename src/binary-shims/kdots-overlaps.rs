fn main() { kdots_tasks::entry_points::overlaps() }
