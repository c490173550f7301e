mod batch;
mod end_to_end;
mod providers;
mod retrieval;
