pub mod kis;
