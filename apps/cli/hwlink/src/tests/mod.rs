mod env;
mod logger;
