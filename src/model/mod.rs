pub mod recipe;
pub mod report;
pub mod run;
pub mod scored;
pub mod table;
