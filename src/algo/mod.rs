pub mod adwin;
pub mod bucket_list;
pub mod bucket_row;
pub mod page_hinkley;
