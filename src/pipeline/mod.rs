pub mod run;
pub mod stage1_preprocess;
pub mod stage2_normalize;
pub mod stage3_score;
pub mod stage4_lists;
