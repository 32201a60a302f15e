pub mod machine_learning;
