mod live_updates;
mod request_resolution;
mod startup;
