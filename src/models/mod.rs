pub mod demand;
pub mod road;
