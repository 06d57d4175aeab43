//! Whole-pipeline tests on synthetic specimens.

mod pipeline;
