mod busy;
mod concurrency;
mod list;
