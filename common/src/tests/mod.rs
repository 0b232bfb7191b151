mod session_key;
