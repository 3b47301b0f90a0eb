mod common;
mod moves;
mod routing;
