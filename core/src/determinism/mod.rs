pub mod run_id;
