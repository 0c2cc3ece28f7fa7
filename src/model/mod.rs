pub mod imtime_function;
pub mod params;
pub mod work_data;
