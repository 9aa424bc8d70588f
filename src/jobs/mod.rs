pub mod sample_generator;
