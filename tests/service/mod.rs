mod crud_test;
mod push_test;
mod reflection_test;
