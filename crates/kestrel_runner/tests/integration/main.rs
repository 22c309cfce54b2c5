mod common;

mod bail;
mod discovery;
mod dispatch;
mod end_to_end;
