pub mod assets;
pub mod backup;
pub mod blocks;
pub mod core;
pub mod events;
pub mod forms;
pub mod metadata;
pub mod modules;
pub mod pages;
pub mod sorting;
