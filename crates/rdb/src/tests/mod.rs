mod helpers;

mod lzf_tests;
