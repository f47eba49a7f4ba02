mod end_to_end;
mod sync;
mod transport;
