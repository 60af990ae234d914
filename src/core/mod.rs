pub mod confirmation;
pub mod context_generator;
pub mod dry_run;
pub mod token_budget;
